use std::collections::HashSet;

/// Static set of chats allowed to modify the board.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    chats: HashSet<i64>,
}

impl AllowList {
    pub fn new<I: IntoIterator<Item = i64>>(chats: I) -> Self {
        Self {
            chats: chats.into_iter().collect(),
        }
    }

    pub fn check(&self, chat_id: i64) -> bool {
        self.chats.contains(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership() {
        let list = AllowList::new([-1002468965180, 5978668914]);
        assert!(list.check(-1002468965180));
        assert!(list.check(5978668914));
        assert!(!list.check(42));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_empty_list_denies_all() {
        let list = AllowList::default();
        assert!(list.is_empty());
        assert!(!list.check(0));
    }
}
