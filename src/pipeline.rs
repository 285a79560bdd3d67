//! Generic, priority-ordered chain of asynchronous processors.
//!
//! Processors run one after another in priority order. The first failing
//! verdict ends the run. A processor that errors or panics is logged and
//! skipped, so it can fail to block but can never block on its own.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};

/// A verdict type the pipeline can short-circuit on.
pub trait Verdict {
    /// The verdict of a run where nothing failed.
    fn pass() -> Self;

    /// Whether this verdict stops the run.
    fn is_failure(&self) -> bool;
}

/// One unit of pipeline logic.
#[async_trait]
pub trait Processor<C, R>: Send + Sync {
    async fn process(&self, context: &C) -> anyhow::Result<R>;
}

/// Processor priority. Higher priorities run first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

struct Registration<C, R> {
    name: String,
    priority: Priority,
    processor: Arc<dyn Processor<C, R>>,
}

/// Ordered processor chain over context `C` producing verdict `R`.
pub struct ProcessorPipeline<C, R> {
    processors: Vec<Registration<C, R>>,
}

impl<C, R> Default for ProcessorPipeline<C, R> {
    fn default() -> Self {
        Self {
            processors: Vec::new(),
        }
    }
}

impl<C, R> ProcessorPipeline<C, R>
where
    C: fmt::Display + Send + Sync,
    R: Verdict + Send,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor. Equal priorities keep registration order.
    pub fn register<P>(&mut self, name: impl Into<String>, priority: Priority, processor: P)
    where
        P: Processor<C, R> + 'static,
    {
        self.register_shared(name, priority, Arc::new(processor));
    }

    /// Register a processor that is shared with other owners.
    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        priority: Priority,
        processor: Arc<dyn Processor<C, R>>,
    ) {
        let position = self
            .processors
            .iter()
            .position(|r| r.priority < priority)
            .unwrap_or(self.processors.len());

        self.processors.insert(
            position,
            Registration {
                name: name.into(),
                priority,
                processor,
            },
        );
    }

    /// Names of the registered processors in run order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processors.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every processor in order and return the first failing verdict,
    /// or a passing one if none failed.
    pub async fn pump(&self, context: &C) -> R {
        for registration in &self.processors {
            let outcome = AssertUnwindSafe(registration.processor.process(context))
                .catch_unwind()
                .await;

            let verdict = match outcome {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(e)) => {
                    let message = format!("{:#}", e);
                    error!(
                        processor = %registration.name,
                        context = %context,
                        error = %message,
                        "Error while processing in pipeline"
                    );
                    continue;
                }
                Err(panic) => {
                    error!(
                        processor = %registration.name,
                        context = %context,
                        panic = panic_message(panic.as_ref()),
                        "Processor panicked in pipeline"
                    );
                    continue;
                }
            };

            if verdict.is_failure() {
                debug!(processor = %registration.name, context = %context, "Pipeline stopped by processor");
                return verdict;
            }
        }

        R::pass()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Outcome {
        Pass,
        Fail(&'static str),
    }

    impl Verdict for Outcome {
        fn pass() -> Self {
            Outcome::Pass
        }

        fn is_failure(&self) -> bool {
            matches!(self, Outcome::Fail(_))
        }
    }

    type TestPipeline = ProcessorPipeline<String, Outcome>;

    struct Fixed(Outcome);

    #[async_trait]
    impl Processor<String, Outcome> for Fixed {
        async fn process(&self, _context: &String) -> anyhow::Result<Outcome> {
            Ok(self.0.clone())
        }
    }

    struct Flagging(Arc<AtomicBool>);

    #[async_trait]
    impl Processor<String, Outcome> for Flagging {
        async fn process(&self, _context: &String) -> anyhow::Result<Outcome> {
            self.0.store(true, Ordering::SeqCst);
            Ok(Outcome::Pass)
        }
    }

    struct Erroring(Arc<AtomicUsize>);

    #[async_trait]
    impl Processor<String, Outcome> for Erroring {
        async fn process(&self, _context: &String) -> anyhow::Result<Outcome> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("lookup exploded")
        }
    }

    struct Panicking;

    #[async_trait]
    impl Processor<String, Outcome> for Panicking {
        async fn process(&self, _context: &String) -> anyhow::Result<Outcome> {
            panic!("processor bug")
        }
    }

    struct Recording(&'static str, Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Processor<String, Outcome> for Recording {
        async fn process(&self, _context: &String) -> anyhow::Result<Outcome> {
            self.1.lock().unwrap().push(self.0);
            Ok(Outcome::Pass)
        }
    }

    #[tokio::test]
    async fn test_empty_pipeline_passes() {
        let pipeline = TestPipeline::new();
        assert_eq!(pipeline.pump(&"ctx".to_string()).await, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_all_pass() {
        let mut pipeline = TestPipeline::new();
        pipeline.register("a", Priority::Normal, Fixed(Outcome::Pass));
        pipeline.register("b", Priority::Normal, Fixed(Outcome::Pass));
        assert_eq!(pipeline.pump(&"ctx".to_string()).await, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_short_circuit_on_failure() {
        let flag = Arc::new(AtomicBool::new(false));

        let mut pipeline = TestPipeline::new();
        pipeline.register("p1", Priority::Normal, Fixed(Outcome::Pass));
        pipeline.register("p2", Priority::Normal, Fixed(Outcome::Fail("X")));
        pipeline.register("p3", Priority::Normal, Flagging(flag.clone()));

        assert_eq!(pipeline.pump(&"ctx".to_string()).await, Outcome::Fail("X"));
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_erroring_processor_is_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut pipeline = TestPipeline::new();
        pipeline.register("broken", Priority::Normal, Erroring(calls.clone()));
        pipeline.register("blocker", Priority::Normal, Fixed(Outcome::Fail("blocked")));

        assert_eq!(pipeline.pump(&"ctx".to_string()).await, Outcome::Fail("blocked"));
        assert_eq!(pipeline.pump(&"ctx".to_string()).await, Outcome::Fail("blocked"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_erroring_processor_alone_passes() {
        let mut pipeline = TestPipeline::new();
        pipeline.register("broken", Priority::Normal, Erroring(Arc::new(AtomicUsize::new(0))));
        assert_eq!(pipeline.pump(&"ctx".to_string()).await, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_panicking_processor_is_skipped() {
        let mut pipeline = TestPipeline::new();
        pipeline.register("panics", Priority::High, Panicking);
        pipeline.register("blocker", Priority::Normal, Fixed(Outcome::Fail("blocked")));

        assert_eq!(pipeline.pump(&"ctx".to_string()).await, Outcome::Fail("blocked"));
    }

    #[tokio::test]
    async fn test_priority_order_with_ties() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut pipeline = TestPipeline::new();
        pipeline.register("normal-1", Priority::Normal, Recording("normal-1", log.clone()));
        pipeline.register("low", Priority::Low, Recording("low", log.clone()));
        pipeline.register("highest", Priority::Highest, Recording("highest", log.clone()));
        pipeline.register("normal-2", Priority::Normal, Recording("normal-2", log.clone()));
        pipeline.register("lowest", Priority::Lowest, Recording("lowest", log.clone()));
        pipeline.register("high", Priority::High, Recording("high", log.clone()));

        let expected = vec!["highest", "high", "normal-1", "normal-2", "low", "lowest"];
        assert_eq!(pipeline.names().collect::<Vec<_>>(), expected);

        pipeline.pump(&"ctx".to_string()).await;
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_shared_registration() {
        let shared: Arc<dyn Processor<String, Outcome>> = Arc::new(Fixed(Outcome::Fail("shared")));

        let mut pipeline = TestPipeline::new();
        pipeline.register_shared("shared", Priority::Normal, shared.clone());
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline.pump(&"ctx".to_string()).await, Outcome::Fail("shared"));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
