//! Normalizes titles from stdin (one per line), or a built-in sample when stdin is a terminal.

use std::io::{self, BufRead, IsTerminal};

use marketmorph::normalizer::{NoiseFilter, TitleNormalizer};
use marketmorph::tagger::RuleTagger;

const SAMPLES: &[&str] = &[
    "Apple Watch Series 8 GPS 41mm (Midnight)",
    "SONY Sony WH-1000XM5 Wireless Noise Canceling Headphones, Black",
    "(Black) Wireless Charger Cable for Phone",
    "Samsung Galaxy S22 Ultra 5G Unlocked 256GB [Renewed]",
    "Anker PowerCore 10000 Portable Charger, Ultra Compact",
];

fn main() -> io::Result<()> {
    let filter = std::env::args()
        .nth(1)
        .and_then(|arg| NoiseFilter::parse(&arg))
        .unwrap_or_default();
    let normalizer = TitleNormalizer::new(RuleTagger::new()).with_noise_filter(filter);

    let titles: Vec<String> = if io::stdin().is_terminal() {
        SAMPLES.iter().map(|s| s.to_string()).collect()
    } else {
        io::stdin().lock().lines().collect::<io::Result<_>>()?
    };

    println!("🧹 Noise filter: {:?}", filter);
    for title in &titles {
        println!("{:<70} -> {}", title, normalizer.normalize(title));
    }
    Ok(())
}
