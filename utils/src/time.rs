/// Milliseconds since the unix epoch.
pub fn get_epoch() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn get_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn epoch_to_timestamp(epoch: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(epoch) {
        Some(datetime) => datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_epoch_to_timestamp() {
        let epoch = 1617000000000;
        let expected = "2021-03-29T06:40:00.000Z";
        assert_eq!(epoch_to_timestamp(epoch), expected);
    }

    #[test]
    fn test_get_epoch_is_after_2021() {
        assert!(get_epoch() > 1617000000000);
    }
}
