use hickory_proto::op::Message;
use sans_domain::Query;

pub trait ResponseCache: Send + Sync {
    /// Returns a copy with TTLs already aged. The transaction id is not
    /// rewritten.
    fn get(&self, query: &Query) -> Option<Message>;

    fn insert(&self, query: &Query, response: &Message);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
