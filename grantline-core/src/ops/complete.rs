/// Names whose lowercase form starts with the lowercase `prefix`, in input
/// order; every name when the prefix is empty
pub fn complete<I, S>(prefix: &str, names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let prefix = prefix.to_lowercase();
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| prefix.is_empty() || name.to_lowercase().starts_with(&prefix))
        .collect()
}
