use crate::domain::PlayerId;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const ID_PREFIX: &str = "player-";
const TOKEN_LEN: usize = 7;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Produces candidate ids for new connections.
///
/// Candidates only need to be plausible; the registry rejects any candidate
/// that collides with a live key and asks for another.
pub trait IdGenerator: Send + fmt::Debug {
    fn next_id(&mut self) -> PlayerId;
}

/// Counter-based ids: `player-0000001`, `player-0000002`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> PlayerId {
        self.counter += 1;
        PlayerId::new(format!("{ID_PREFIX}{}", base36(self.counter as u128, TOKEN_LEN)))
    }
}

/// Short random tokens drawn from a v4 uuid
#[derive(Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> PlayerId {
        let token = base36(Uuid::new_v4().as_u128(), TOKEN_LEN);
        PlayerId::new(format!("{ID_PREFIX}{}", &token[token.len() - TOKEN_LEN..]))
    }
}

/// Selects which generator a relay uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdScheme {
    #[default]
    Sequential,
    Random,
}

impl IdScheme {
    pub fn generator(self) -> Box<dyn IdGenerator> {
        match self {
            IdScheme::Sequential => Box::new(SequentialIds::new()),
            IdScheme::Random => Box::new(RandomIds),
        }
    }
}

impl fmt::Display for IdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdScheme::Sequential => write!(f, "sequential"),
            IdScheme::Random => write!(f, "random"),
        }
    }
}

impl FromStr for IdScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(IdScheme::Sequential),
            "random" => Ok(IdScheme::Random),
            other => Err(format!(
                "unknown id scheme '{other}' (expected 'sequential' or 'random')"
            )),
        }
    }
}

/// Lowercase base-36 rendering, left-padded with zeros to `min_len`
fn base36(mut value: u128, min_len: usize) -> String {
    let mut digits = Vec::with_capacity(min_len.max(8));
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    while digits.len() < min_len {
        digits.push(b'0');
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}
