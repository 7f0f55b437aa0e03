use serde::{Deserialize, Serialize};

/// A logical key the engine and game logic can query.
///
/// Display surfaces translate their platform key codes into these; keys
/// with no mapping are simply never reported as pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    W,
    A,
    S,
    D,
    N,
    M,
    Space,
    Tab,
    Escape,
}
