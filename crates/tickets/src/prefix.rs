/// Derive the display-id prefix for a repository reference.
///
/// Takes the last path segment, lowercases it, splits on non-alphanumeric
/// runs and picks the last purely alphabetic token of 2–6 characters.
/// Otherwise the first (up to) four letters of the name are used.
pub fn repo_prefix(repo_full_name: &str) -> String {
    let name = repo_full_name
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    let picked = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .rev()
        .find(|t| (2..=6).contains(&t.len()) && t.chars().all(|c| c.is_ascii_alphabetic()));
    if let Some(token) = picked {
        return token.to_ascii_uppercase();
    }

    let letters: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(4)
        .collect();
    if letters.is_empty() {
        "T".into()
    } else {
        letters.to_ascii_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_short_alphabetic_token_wins() {
        assert_eq!(repo_prefix("acme/hal-portal"), "PORTAL");
        assert_eq!(repo_prefix("acme/my-app-v2"), "APP");
        assert_eq!(repo_prefix("Acme/Kanban_HAL"), "HAL");
    }

    #[test]
    fn falls_back_to_leading_letters() {
        assert_eq!(repo_prefix("acme/superlongname"), "SUPE");
        assert_eq!(repo_prefix("acme/x"), "X");
        assert_eq!(repo_prefix("acme/v2"), "V");
    }

    #[test]
    fn no_letters_at_all() {
        assert_eq!(repo_prefix("acme/1234"), "T");
    }
}
