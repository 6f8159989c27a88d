use super::Inventory;

/// Items present in `source` whose names are absent from `destination`.
///
/// Only names are compared: an emoji that exists on both sides is never a
/// transfer candidate, whatever its image.
#[must_use]
pub fn diff(source: &Inventory, destination: &Inventory) -> Inventory {
    let mut missing = source.clone();
    for (name, _) in destination.iter() {
        missing.remove(name);
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_keeps_only_names_missing_from_destination() {
        let source = Inventory::from_entries([
            (":dog:", "u1"),
            (":cat:", "u2"),
            (":x:", "alias:cat"),
        ]);
        let destination = Inventory::from_entries([(":cat:", "u2")]);

        let missing = diff(&source, &destination);
        assert_eq!(missing, Inventory::from_entries([(":dog:", "u1")]));
    }

    #[test]
    fn test_diff_is_empty_when_source_is_subset() {
        let source = Inventory::from_entries([("a", "1"), ("b", "2")]);
        let destination = Inventory::from_entries([("a", "1"), ("b", "2"), ("c", "3")]);
        assert!(diff(&source, &destination).is_empty());
    }

    #[test]
    fn test_diff_ignores_image_differences_for_shared_names() {
        let source = Inventory::from_entries([("shared", "https://a/shared.png")]);
        let destination = Inventory::from_entries([("shared", "https://b/other.png")]);
        assert!(diff(&source, &destination).is_empty());
    }

    #[test]
    fn test_diff_against_empty_destination_is_source() {
        let source = Inventory::from_entries([("a", "1"), ("b", "2")]);
        assert_eq!(diff(&source, &Inventory::default()), source);
    }

    #[test]
    fn test_diff_contains_exactly_source_minus_destination() {
        let source = Inventory::from_entries((0..20).map(|i| (format!("e{i}"), format!("u{i}"))));
        let destination =
            Inventory::from_entries((10..30).map(|i| (format!("e{i}"), format!("v{i}"))));
        let missing = diff(&source, &destination);

        for (name, url) in source.iter() {
            assert_eq!(
                missing.contains(name),
                !destination.contains(name),
                "membership of {name}"
            );
            if missing.contains(name) {
                assert_eq!(missing.get(name), Some(url));
            }
        }
        assert!(missing.iter().all(|(name, _)| source.contains(name)));
        assert_eq!(missing.len(), 10);
    }
}
