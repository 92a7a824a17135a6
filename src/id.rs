use uuid::Uuid;

/// Fresh opaque identifier for armies, units, buildings, knowledge
/// instances and fights.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Well-formed opaque identifier, as produced by [`new_id`].
pub fn is_valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Allocator of fresh vertex IDs for a map under edition.
///
/// Always yields IDs above every vertex already present, and never 0.
#[derive(Debug, Clone, Copy)]
pub struct VertexIds {
    last: u64,
}

impl VertexIds {
    pub fn above<I: IntoIterator<Item = u64>>(used: I) -> Self {
        Self {
            last: used.into_iter().max().unwrap_or(0),
        }
    }

    pub fn take(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_ids_skip_existing_ones() {
        let mut ids = VertexIds::above([4, 17, 9]);
        assert_eq!((ids.take(), ids.take()), (18, 19));
        assert_eq!(VertexIds::above(std::iter::empty()).take(), 1);
    }

    #[test]
    fn opaque_ids_are_unique_and_valid() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(is_valid_id(&a));
        assert!(!is_valid_id("not-an-id"));
    }
}
