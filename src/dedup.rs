use std::collections::HashSet;
use std::hash::Hash;

/// Drops exact duplicates, keeping the first occurrence and the original order.
///
/// Equality is the derived field-by-field comparison, so two posts whose text differs only in
/// whitespace or case are both kept.
pub fn remove_duplicates<T>(items: Vec<T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::with_capacity(items.len());
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(item.clone()) {
            unique.push(item);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ScrapedPost;

    fn post(text: &str, likes: Option<&str>) -> ScrapedPost {
        ScrapedPost {
            post_text: text.to_string(),
            likes: likes.map(str::to_string),
            comments: None,
            shares: None,
            post_time: None,
        }
    }

    #[test]
    fn keeps_first_occurrence_in_order() {
        let items = vec![
            post("a", Some("1")),
            post("b", None),
            post("a", Some("1")),
            post("c", None),
            post("b", None),
        ];
        let unique = remove_duplicates(items);
        let texts: Vec<_> = unique.iter().map(|p| p.post_text.as_str()).collect();
        assert_eq!(texts, ["a", "b", "c"]);
    }

    #[test]
    fn any_field_difference_keeps_both() {
        let unique = remove_duplicates(vec![post("a", Some("1")), post("a", Some("2"))]);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn whitespace_variants_are_not_merged() {
        let unique = remove_duplicates(vec![
            post("hello world", None),
            post("hello  world", None),
            post("Hello world", None),
        ]);
        assert_eq!(unique.len(), 3);
    }
}
