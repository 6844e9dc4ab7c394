use uuid::Uuid;

/// Source of primary keys. IDs are always generated here, never by the database.
pub trait UidService: Send + Sync {
    fn generate(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomUidService;

impl UidService for RandomUidService {
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Hands out a fixed sequence of IDs; used by tests to predict generated keys.
#[derive(Debug, Default)]
pub struct SequenceUidService {
    ids: std::sync::Mutex<std::collections::VecDeque<Uuid>>,
}

impl SequenceUidService {
    pub fn new(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            ids: std::sync::Mutex::new(ids.into_iter().collect()),
        }
    }
}

impl UidService for SequenceUidService {
    fn generate(&self) -> Uuid {
        self.ids
            .lock()
            .ok()
            .and_then(|mut ids| ids.pop_front())
            .unwrap_or_else(Uuid::new_v4)
    }
}
