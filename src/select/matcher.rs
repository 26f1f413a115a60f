use super::option::SelectOption;

/// Case and surrounding-whitespace insensitive substring test.
///
/// An empty (or blank) query matches every label.
pub fn matches(label: &str, query: &str) -> bool {
    normalize(label).contains(&normalize(query))
}

pub fn filter_options(options: &[SelectOption], query: &str) -> Vec<SelectOption> {
    let query = normalize(query);
    options
        .iter()
        .filter(|option| normalize(option.label()).contains(&query))
        .cloned()
        .collect()
}

pub(crate) fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn matches_case_insensitive_substring() {
        assert!(matches("Jane Austen", "jane"));
        assert!(matches("Jane Austen", "AUSTEN"));
        assert!(matches("  Jane Austen  ", " e a "));
        assert!(!matches("Jane Austen", "zz"));
    }

    #[test]
    fn filter_preserves_order() {
        let options = vec![
            SelectOption::new("Jane Austen", "3"),
            SelectOption::new("Mark Twain", "5"),
            SelectOption::new("Janet Frame", "8"),
        ];
        let labels = filter_options(&options, "jan")
            .into_iter()
            .map(|option| option.label().to_string())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["Jane Austen", "Janet Frame"]);
    }

    proptest! {
        #[test]
        fn empty_query_matches_everything(label in ".{0,32}") {
            prop_assert!(matches(&label, ""));
            prop_assert!(matches(&label, "   "));
        }

        #[test]
        fn label_matches_itself(label in "[a-zA-Z ]{0,32}") {
            prop_assert!(matches(&label, &label));
        }
    }
}
