/// Sequence generator for activity and sustainability log ids.
///
/// One counter serves both collections, so an id is never issued twice across
/// them. The registry is only advanced after the record that consumed the id
/// has been committed; a rejected create leaves it untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdRegistry {
    next: u64,
}

impl IdRegistry {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// The id the next successful create will receive.
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Consume the current id and return it.
    pub fn advance(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Whether `id` has been handed out by this registry.
    pub fn is_issued(&self, id: u64) -> bool {
        id < self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_from_zero() {
        let mut ids = IdRegistry::default();
        assert_eq!(ids.advance(), 0);
        assert_eq!(ids.advance(), 1);
        assert_eq!(ids.advance(), 2);
        assert_eq!(ids.peek(), 3);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let ids = IdRegistry::starting_at(5);
        assert_eq!(ids.peek(), 5);
        assert_eq!(ids.peek(), 5);
        assert!(!ids.is_issued(5));
        assert!(ids.is_issued(4));
    }
}
