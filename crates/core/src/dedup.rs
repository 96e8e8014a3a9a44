use std::collections::HashSet;

/// Collapses exact-duplicate texts. Output order is not part of the contract.
pub fn unique_texts<I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .filter(|text| seen.insert(text.clone()))
        .collect()
}
