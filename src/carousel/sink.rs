/// Receives every event the engine decides to forward.
///
/// Called inline from [`Carousel::log`](super::Carousel::log), so an
/// implementation must not block for long.
pub trait Sink {
    fn forward(&mut self, key: &str, entry: &str);
}

impl<F> Sink for F
where
    F: FnMut(&str, &str),
{
    fn forward(&mut self, key: &str, entry: &str) {
        self(key, entry)
    }
}

/// Sink keeping every forwarded `(key, entry)` pair in order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub entries: Vec<(String, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Sink for MemorySink {
    fn forward(&mut self, key: &str, entry: &str) {
        self.entries.push((key.to_owned(), entry.to_owned()));
    }
}
