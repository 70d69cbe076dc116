//! Procedural display names.
//!
//! Names are a pure function of the client id, so a client that reconnects
//! with the same id always gets the same name without the gateway having to
//! persist anything.

const ADJECTIVES: [&str; 20] = [
    "Funny", "Serious", "Clumsy", "Swift", "Brave", "Quiet", "Loud", "Happy", "Sad", "Zen", "Mad",
    "Groovy", "Funkie", "Mighty", "Wobbly", "Salty", "Spicy", "Cool", "Hot", "Icy",
];

const NOUNS: [&str; 20] = [
    "Wizard", "Ninja", "Pirate", "Cactus", "Panda", "Robot", "Alien", "Zombie", "Viking", "Ghost",
    "Penguin", "Badger", "Hamster", "Dragon", "Unicorn", "Gnome", "Troll", "Goblin", "Sprite",
    "Fairy",
];

/// Derive a display name like "SwiftBadger" from a client id.
pub fn display_name(client_id: &str) -> String {
    let mut hash: u32 = 0;
    for b in client_id.bytes() {
        // sdbm string hash
        hash = (b as u32)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash);
    }
    let adj = ADJECTIVES[hash as usize % ADJECTIVES.len()];
    let noun = NOUNS[(hash as usize / ADJECTIVES.len()) % NOUNS.len()];
    format!("{adj}{noun}")
}
