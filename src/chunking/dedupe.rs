use std::collections::HashMap;
use std::collections::HashSet;

/// Makes column names unique: the k-th repeat of `name` becomes `name.k`.
/// First occurrences are kept as is. A generated name that collides with any
/// raw name or an earlier output takes the next free suffix instead.
pub fn dedupe(names: &[String]) -> Vec<String> {
    let raw: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut emitted = HashSet::<String>::with_capacity(names.len());
    let mut suffixes = HashMap::<&str, usize>::new();
    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        let resolved = if emitted.contains(name) {
            let suffix = suffixes.entry(name.as_str()).or_insert(0);
            loop {
                *suffix += 1;
                let candidate = format!("{name}.{suffix}");
                if !raw.contains(candidate.as_str()) && !emitted.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            name.to_owned()
        };
        emitted.insert(resolved.to_owned());
        unique.push(resolved);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_repeats_get_suffixes() {
        assert_eq!(dedupe(&names(&["A", "B", "A", "A"])), names(&["A", "B", "A.1", "A.2"]));
    }

    #[test]
    fn test_unique_names_untouched() {
        let input = names(&["Name", "Price-Unit", "column3"]);
        assert_eq!(dedupe(&input), input);
        assert!(dedupe(&[]).is_empty());
    }

    #[test]
    fn test_generated_names_skip_raw_names() {
        let output = dedupe(&names(&["A", "A", "A.1"]));
        assert_eq!(output, names(&["A", "A.2", "A.1"]));

        let output = dedupe(&names(&["A.1", "A", "A", "A"]));
        assert_eq!(output, names(&["A.1", "A", "A.2", "A.3"]));
        let distinct: HashSet<&String> = output.iter().collect();
        assert_eq!(distinct.len(), output.len());
    }
}
