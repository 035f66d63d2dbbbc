//! The logical key schema.
//!
//! | key                                   | value        |
//! |---------------------------------------|--------------|
//! | `shortlinks / <code>`                 | `LinkRecord` |
//! | `analytics / <code> / <sequence>`     | `ClickEvent` |
//! | `owners / <owner> / <code>`           | `ShortCode`  |

use crate::kv::Key;
use linkwatch_core::{OwnerId, ShortCode};

pub const LINKS: &str = "shortlinks";
pub const ANALYTICS: &str = "analytics";
pub const OWNERS: &str = "owners";

pub fn links() -> Key {
    Key::new([LINKS])
}

pub fn link(code: &ShortCode) -> Key {
    Key::new([LINKS, code.as_str()])
}

pub fn clicks(code: &ShortCode) -> Key {
    Key::new([ANALYTICS, code.as_str()])
}

pub fn click(code: &ShortCode, sequence: u64) -> Key {
    clicks(code).push(sequence)
}

pub fn owned_by(owner: &OwnerId) -> Key {
    Key::new([OWNERS, owner.as_str()])
}

pub fn owner(owner: &OwnerId, code: &ShortCode) -> Key {
    owned_by(owner).push(code.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_do_not_overlap() {
        let code = ShortCode::new_unchecked("abc");
        // an owner named like a namespace stays under `owners`
        let tricky = OwnerId::new(LINKS);

        assert!(link(&code).starts_with(&links()));
        assert!(click(&code, 1).starts_with(&clicks(&code)));
        assert!(!owner(&tricky, &code).starts_with(&links()));
        assert_eq!(owner(&tricky, &code).to_string(), "owners/shortlinks/abc");
    }
}
