pub mod id;
pub mod logging;

#[cfg(test)]
mod tests {
    use super::{id, logging};

    #[test]
    fn logging_init_accepts_levels_and_formats() {
        // Should not panic
        logging::init("info", "text");
        logging::init("debug", "json");
        logging::init("nonsense", "text");
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let a = id::subscriber_id();
        let b = id::subscriber_id();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn correlation_ids_are_unique() {
        assert_ne!(id::correlation_id(), id::correlation_id());
    }
}
