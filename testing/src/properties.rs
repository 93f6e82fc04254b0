//! proptest strategies for gateway inputs.
//!
//! ```ignore
//! proptest! {
//!     #[test]
//!     fn titles_survive(title in properties::title()) { ... }
//! }
//! ```

use proptest::prelude::*;

/// Non-blank todo titles, including unicode and surrounding spaces.
pub fn title() -> impl Strategy<Value = String> {
    "[ ]{0,2}[a-zA-Z0-9äöüß😀][a-zA-Z0-9 äöüß😀.,!?-]{0,60}"
}

/// Strings that are empty or contain only whitespace.
pub fn blank() -> impl Strategy<Value = String> {
    "[ \t\n]{0,6}"
}

/// Todo ids safe to use as a single URL path segment.
pub fn todo_id() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9]{1,12}",
        "[0-9]{1,6}",
        Just("550e8400-e29b-41d4-a716-446655440000".to_string()),
    ]
}

/// Caller ids as sent in `X-User-ID`.
pub fn caller_id() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_.@-]{0,20}"
}

/// Optional completion flag for updates.
pub fn completed() -> impl Strategy<Value = Option<bool>> {
    proptest::option::of(any::<bool>())
}
