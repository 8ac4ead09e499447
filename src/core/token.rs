use uuid::Uuid;

const WORDS: &[&str] = &[
    "acorn", "amber", "anchor", "apple", "aspen", "badger", "basil", "beacon",
    "birch", "bison", "bramble", "breeze", "brook", "cactus", "canyon", "cedar",
    "cherry", "cinder", "clover", "cobalt", "comet", "coral", "cotton", "crane",
    "daisy", "delta", "dune", "ember", "falcon", "fern", "fig", "flint",
    "forest", "fox", "garnet", "ginger", "glacier", "granite", "harbor", "hazel",
    "heron", "honey", "iris", "ivy", "jasper", "juniper", "kelp", "lagoon",
    "lantern", "lemon", "lilac", "linen", "maple", "marble", "meadow", "mint",
    "moss", "nectar", "nutmeg", "oak", "olive", "onyx", "orchid", "otter",
    "pebble", "pepper", "pine", "plum", "poppy", "quartz", "quill", "raven",
    "reed", "river", "robin", "saffron", "sage", "sparrow", "spruce", "summit",
    "thistle", "thyme", "tulip", "tundra", "valley", "velvet", "walnut", "willow",
    "wren", "yarrow", "zephyr", "zinnia",
];

/// A shareable list token of three words, e.g. `"maple otter quartz"`.
pub fn generate_token() -> String {
    let bytes = *Uuid::new_v4().as_bytes();
    bytes
        .chunks_exact(2)
        .take(3)
        .map(|pair| {
            let n = u16::from_be_bytes([pair[0], pair[1]]) as usize;
            WORDS[n % WORDS.len()]
        })
        .collect::<Vec<_>>()
        .join(" ")
}
