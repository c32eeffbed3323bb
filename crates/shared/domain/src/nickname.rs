//! Random display names for accounts registered without one.

use rand::{seq::SliceRandom, Rng};

const ADJECTIVES: &[&str] = &[
    "clever", "jolly", "brave", "sly", "gentle", "swift", "quiet", "bold", "lucky", "mellow",
];

const NOUNS: &[&str] = &[
    "panda", "fox", "raccoon", "koala", "lion", "otter", "heron", "badger", "lynx", "walrus",
];

/// `adjective_noun_NNN`, always a valid nickname.
pub fn generate_nickname() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("quiet");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("otter");
    let number: u16 = rng.gen_range(0..1000);
    format!("{}_{}_{}", adjective, noun, number)
}
