/// Treats missing, empty and whitespace-only values alike.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn is_blank(value: Option<&str>) -> bool {
    non_blank(value).is_none()
}

/// Compares optional names the way providers report them, where a blank
/// value and an absent one mean the same thing.
pub fn same_optional_name(a: Option<&str>, b: Option<&str>) -> bool {
    non_blank(a) == non_blank(b)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
