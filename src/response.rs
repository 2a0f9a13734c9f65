use std::collections::HashMap;

/// Parses a Key-Value Form message, as returned by `check_authentication`.
///
/// Each line is split on its first colon; values may contain further colons, keys may not.
/// Lines without a colon are skipped and a repeated key keeps its last value.
pub fn parse_key_values(body: &str) -> HashMap<String, String> {
    body.split('\n')
        .filter_map(|line| {
            let mut pair = line.splitn(2, ':');
            Some((pair.next()?.to_owned(), pair.next()?.to_owned()))
        })
        .collect()
}
