use std::future::Future;

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

/// Attempts made before nickname generation gives up.
pub const MAX_NICKNAME_ATTEMPTS: usize = 10;

pub const MIN_NICKNAME_LENGTH: usize = 3;
pub const MAX_NICKNAME_LENGTH: usize = 32;

const ADJECTIVES: &[&str] = &[
    "brave", "calm", "clever", "eager", "fancy", "gentle", "happy", "jolly", "keen", "lively",
    "mighty", "nimble", "proud", "quick", "quiet", "shiny", "swift", "witty", "bold", "bright",
];

const NOUNS: &[&str] = &[
    "badger", "falcon", "otter", "panda", "tiger", "wolf", "heron", "lynx", "raven", "fox",
    "koala", "moose", "owl", "puffin", "seal", "sparrow", "walrus", "yak", "zebra", "bison",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NicknameError {
    #[error("nickname must be between 3 and 32 characters")]
    InvalidLength,
    #[error("nickname may only contain letters, digits, '_' and '-'")]
    InvalidCharacters,
    #[error("nickname already exists")]
    Taken,
    #[error("could not generate a unique nickname after {attempts} attempts")]
    Exhausted { attempts: usize },
}

impl NicknameError {
    pub fn code(&self) -> &'static str {
        match self {
            NicknameError::InvalidLength => "invalid_length",
            NicknameError::InvalidCharacters => "invalid_characters",
            NicknameError::Taken => "taken",
            NicknameError::Exhausted { .. } => "exhausted",
        }
    }
}

/// `{adjective}_{noun}_{n}` with `n` in `0..1000`.
pub fn generate_nickname<R: Rng>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("happy");
    let noun = NOUNS.choose(rng).copied().unwrap_or("otter");
    let number: u16 = rng.gen_range(0..1000);
    format!("{adjective}_{noun}_{number}")
}

pub fn validate_nickname(nickname: &str) -> Result<(), NicknameError> {
    let len = nickname.chars().count();
    if !(MIN_NICKNAME_LENGTH..=MAX_NICKNAME_LENGTH).contains(&len) {
        return Err(NicknameError::InvalidLength);
    }
    if !nickname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(NicknameError::InvalidCharacters);
    }
    Ok(())
}

/// Settle the nickname for a new account.
///
/// `None` means the field was never set and always leads to generation.
/// A supplied value, even an empty one, is validated and used as-is.
/// `is_taken` asks the identity store whether a nickname is already in use.
pub async fn resolve_nickname<F, Fut, E>(supplied: Option<String>, is_taken: F) -> Result<String, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: From<NicknameError>,
{
    resolve_nickname_with(supplied, || generate_nickname(&mut rand::thread_rng()), is_taken).await
}

pub async fn resolve_nickname_with<G, F, Fut, E>(
    supplied: Option<String>,
    mut generate: G,
    mut is_taken: F,
) -> Result<String, E>
where
    G: FnMut() -> String,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: From<NicknameError>,
{
    if let Some(nickname) = supplied {
        validate_nickname(&nickname)?;
        if is_taken(nickname.clone()).await? {
            return Err(NicknameError::Taken.into());
        }
        return Ok(nickname);
    }

    for attempt in 1..=MAX_NICKNAME_ATTEMPTS {
        let candidate = generate();
        if !is_taken(candidate.clone()).await? {
            tracing::debug!(attempt, nickname = %candidate, "generated nickname");
            return Ok(candidate);
        }
    }

    tracing::warn!(
        attempts = MAX_NICKNAME_ATTEMPTS,
        "nickname generation exhausted its retry budget"
    );
    Err(NicknameError::Exhausted {
        attempts: MAX_NICKNAME_ATTEMPTS,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn store(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn generated_nicknames_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let nickname = generate_nickname(&mut rng);
            assert_eq!(validate_nickname(&nickname), Ok(()), "{nickname}");
            assert_eq!(nickname.split('_').count(), 3);
        }
    }

    #[test]
    fn rejects_bad_supplied_nicknames() {
        assert_eq!(validate_nickname(""), Err(NicknameError::InvalidLength));
        assert_eq!(validate_nickname("ab"), Err(NicknameError::InvalidLength));
        assert_eq!(
            validate_nickname("has space"),
            Err(NicknameError::InvalidCharacters)
        );
        assert_eq!(validate_nickname("ok_name-1"), Ok(()));
    }

    #[tokio::test]
    async fn supplied_unique_nickname_is_used_as_is() {
        let existing = store(&["taken_one"]);
        let existing = &existing;
        let nickname = resolve_nickname(Some("fresh_name".into()), |n| async move {
            Ok::<_, NicknameError>(existing.contains(&n))
        })
        .await
        .unwrap();
        assert_eq!(nickname, "fresh_name");
    }

    #[tokio::test]
    async fn supplied_taken_nickname_conflicts() {
        let existing = store(&["taken_one"]);
        let existing = &existing;
        let err = resolve_nickname(Some("taken_one".into()), |n| async move {
            Ok::<_, NicknameError>(existing.contains(&n))
        })
        .await
        .unwrap_err();
        assert_eq!(err, NicknameError::Taken);
    }

    #[tokio::test]
    async fn empty_supplied_nickname_is_rejected_not_generated() {
        let err = resolve_nickname(Some(String::new()), |_| async {
            Ok::<_, NicknameError>(false)
        })
        .await
        .unwrap_err();
        assert_eq!(err, NicknameError::InvalidLength);
    }

    #[tokio::test]
    async fn unset_nickname_skips_collisions() {
        let existing = store(&["happy_otter_1", "happy_otter_2"]);
        let existing = &existing;
        let mut candidates = ["happy_otter_1", "happy_otter_2", "happy_otter_3"].into_iter();

        let nickname = resolve_nickname_with(
            None,
            || candidates.next().unwrap().to_string(),
            |n| async move { Ok::<_, NicknameError>(existing.contains(&n)) },
        )
        .await
        .unwrap();

        assert_eq!(nickname, "happy_otter_3");
        assert!(!existing.contains(&nickname));
    }

    #[tokio::test]
    async fn unset_nickname_never_collides_with_store() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut existing = HashSet::new();
        for _ in 0..300 {
            let snapshot = &existing;
            let nickname = resolve_nickname_with(
                None,
                || generate_nickname(&mut rng),
                |n| async move { Ok::<_, NicknameError>(snapshot.contains(&n)) },
            )
            .await
            .unwrap();
            assert!(existing.insert(nickname));
        }
    }

    #[tokio::test]
    async fn exhausts_after_bounded_attempts() {
        let mut calls = 0;
        let err = resolve_nickname_with(
            None,
            || {
                calls += 1;
                "always_the_same_0".to_string()
            },
            |_| async { Ok::<_, NicknameError>(true) },
        )
        .await
        .unwrap_err();

        assert_eq!(
            err,
            NicknameError::Exhausted {
                attempts: MAX_NICKNAME_ATTEMPTS
            }
        );
        assert_eq!(calls, MAX_NICKNAME_ATTEMPTS);
    }
}
