//! `BaseListener` — construction, start and teardown of a listener's two
//! background tasks.
//!
//! ```text
//!            start()             stop()
//! Created ─────────────► Started ────────► Stopped
//! ```
//!
//! Every other transition is rejected with a typed error. Both tasks get a
//! child of one root token and hold a drop guard on that root, so the exit of
//! either one (cancel, failed subscription, closed channel) tears down the
//! other.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::channel::{delivery_channel, DeliveryReceiver, DeliverySender};
use crate::client::ChainClient;
use crate::config::{AcquisitionMode, ListenerConfig};
use crate::error::{ChainClientError, ListenerError};
use crate::listener::{HeaderHook, Listener};
use crate::logger::{default_logger, Logger, LoggerHandle, LoggerSlot};
use crate::processor::{run_processor, ProcessorStats};
use crate::queue::QueueConnector;
use crate::source::{run_polling, run_subscription, AcquisitionExit};

/// Run-state of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ListenerState {
    Created = 0,
    Started = 1,
    Stopped = 2,
}

impl ListenerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Started,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Shared lifecycle that concrete listeners compose.
pub struct BaseListener {
    config: ListenerConfig,
    state: AtomicU8,
    logger: LoggerSlot,
    client: Arc<dyn ChainClient>,
    queue: Arc<dyn QueueConnector>,
    hook: Arc<dyn HeaderHook>,
    /// Created with the listener, moved into the tasks by `start`.
    channel: Option<(DeliverySender, DeliveryReceiver)>,
    root: CancellationToken,
    acquisition: Option<CancellationToken>,
    processing: Option<CancellationToken>,
    /// Join handles are cleared once joined; abort handles stay for
    /// `is_finished`.
    acquisition_task: Option<JoinHandle<AcquisitionExit>>,
    processing_task: Option<JoinHandle<ProcessorStats>>,
    aborts: Vec<AbortHandle>,
}

impl BaseListener {
    /// Build a listener around `hook`.
    ///
    /// `client_factory` is called exactly once; if it fails the listener is
    /// never created and nothing is spawned.
    pub fn new<F>(
        config: ListenerConfig,
        client_factory: F,
        queue: Arc<dyn QueueConnector>,
        hook: Arc<dyn HeaderHook>,
    ) -> Result<Self, ListenerError>
    where
        F: FnOnce() -> Result<Arc<dyn ChainClient>, ChainClientError>,
    {
        config.validate()?;

        let client = client_factory().map_err(|err| {
            tracing::error!(
                listener = %config.name,
                error = %err,
                "error while getting chain client"
            );
            ListenerError::ChainClient(err)
        })?;

        Ok(Self {
            logger: LoggerSlot::new(default_logger(&config.name)),
            state: AtomicU8::new(ListenerState::Created as u8),
            client,
            queue,
            hook,
            channel: Some(delivery_channel()),
            root: CancellationToken::new(),
            acquisition: None,
            processing: None,
            acquisition_task: None,
            processing_task: None,
            aborts: Vec::new(),
            config,
        })
    }

    /// Launch the processing task, then the acquisition task.
    ///
    /// Returns as soon as both are spawned. Task failures after that point
    /// only show up in the logs and through [`closed`](Self::closed).
    pub fn start(&mut self) -> Result<(), ListenerError> {
        let runtime = Handle::try_current().map_err(|_| ListenerError::NoRuntime)?;

        self.transition(ListenerState::Created, ListenerState::Started)
            .map_err(|current| match current {
                ListenerState::Stopped => ListenerError::AlreadyStopped,
                _ => ListenerError::AlreadyStarted,
            })?;
        let (sender, receiver) = self.channel.take().ok_or(ListenerError::AlreadyStarted)?;

        let logger = self.logger.handle();
        logger.in_scope(|| {
            tracing::info!(mode = %self.config.mode, "starting listener")
        });

        let acquisition = self.root.child_token();
        let processing = self.root.child_token();

        self.processing_task = Some(spawn_linked(
            &runtime,
            &self.root,
            run_processor(receiver, self.hook.clone(), processing.clone(), logger.clone()),
        ));

        let client = self.client.clone();
        self.acquisition_task = Some(match self.config.mode {
            AcquisitionMode::Polling => spawn_linked(
                &runtime,
                &self.root,
                run_polling(
                    client,
                    sender,
                    self.config.poll_interval(),
                    acquisition.clone(),
                    logger.clone(),
                ),
            ),
            AcquisitionMode::Subscription => spawn_linked(
                &runtime,
                &self.root,
                run_subscription(client, sender, acquisition.clone(), logger.clone()),
            ),
        });

        self.aborts = self
            .processing_task
            .iter()
            .map(JoinHandle::abort_handle)
            .chain(self.acquisition_task.iter().map(JoinHandle::abort_handle))
            .collect();
        self.acquisition = Some(acquisition);
        self.processing = Some(processing);
        Ok(())
    }

    /// Cancel both tasks and wait up to `shutdown_timeout` for them to exit.
    pub async fn stop(&mut self) -> Result<(), ListenerError> {
        self.transition(ListenerState::Started, ListenerState::Stopped)
            .map_err(|current| match current {
                ListenerState::Created => ListenerError::NotStarted,
                _ => ListenerError::AlreadyStopped,
            })?;

        let logger = self.logger.handle();
        logger.in_scope(|| tracing::info!("stopping listener"));
        self.root.cancel();

        let timeout = self.config.shutdown_timeout();
        let joined = tokio::time::timeout(timeout, async {
            log_acquisition_exit(&logger, join_task(&mut self.acquisition_task).await);
            log_processing_exit(&logger, join_task(&mut self.processing_task).await);
        })
        .await;

        if joined.is_err() {
            for handle in &self.aborts {
                handle.abort();
            }
            // aborted tasks finish at their next poll
            log_acquisition_exit(&logger, join_task(&mut self.acquisition_task).await);
            log_processing_exit(&logger, join_task(&mut self.processing_task).await);

            logger.in_scope(|| {
                tracing::error!(
                    timeout_ms = self.config.shutdown_timeout_ms,
                    "listener tasks did not exit in time; aborted"
                )
            });
            return Err(ListenerError::ShutdownTimeout {
                listener: self.config.name.clone(),
                ms: self.config.shutdown_timeout_ms,
            });
        }

        logger.in_scope(|| tracing::info!("listener stopped"));
        Ok(())
    }

    /// Fire the acquisition-side signal. Returns `false` before `start`.
    pub fn cancel_acquisition(&self) -> bool {
        self.acquisition.as_ref().map(CancellationToken::cancel).is_some()
    }

    /// Fire the processing-side signal. Returns `false` before `start`.
    pub fn cancel_processing(&self) -> bool {
        self.processing.as_ref().map(CancellationToken::cancel).is_some()
    }

    /// Resolves once the listener has been torn down, by `stop` or because
    /// one of its tasks exited.
    pub async fn closed(&self) {
        self.root.cancelled().await
    }

    /// `true` once both spawned tasks have exited (or were never spawned).
    pub fn is_finished(&self) -> bool {
        self.aborts.iter().all(AbortHandle::is_finished)
    }

    pub fn state(&self) -> ListenerState {
        ListenerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Configured name, for log correlation.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// The current logger.
    pub fn logger(&self) -> Logger {
        self.logger.handle().current()
    }

    /// Replace the logger; running tasks switch over at their next log line.
    pub fn set_logger(&self, logger: Logger) {
        self.logger.set(logger);
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn queue(&self) -> &Arc<dyn QueueConnector> {
        &self.queue
    }

    fn transition(&self, from: ListenerState, to: ListenerState) -> Result<(), ListenerState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(ListenerState::from_u8)
    }
}

/// Await the task in `slot`, clearing the slot once it has completed.
///
/// Cancel-safe: if the returned future is dropped mid-way the handle stays in
/// place and can be awaited again.
async fn join_task<T>(slot: &mut Option<JoinHandle<T>>) -> Option<Result<T, JoinError>> {
    let result = slot.as_mut()?.await;
    *slot = None;
    Some(result)
}

fn log_acquisition_exit(
    logger: &LoggerHandle,
    joined: Option<Result<AcquisitionExit, JoinError>>,
) {
    match joined {
        Some(Ok(exit)) => {
            logger.in_scope(|| tracing::debug!(exit = %exit, "acquisition task joined"))
        }
        Some(Err(err)) => {
            logger.in_scope(|| tracing::warn!(error = %err, "acquisition task did not complete"))
        }
        None => {}
    }
}

fn log_processing_exit(
    logger: &LoggerHandle,
    joined: Option<Result<ProcessorStats, JoinError>>,
) {
    match joined {
        Some(Ok(stats)) => logger.in_scope(|| {
            tracing::debug!(processed = stats.processed, "processing task joined")
        }),
        Some(Err(err)) => {
            logger.in_scope(|| tracing::warn!(error = %err, "processing task did not complete"))
        }
        None => {}
    }
}

/// Spawn `fut` holding a drop guard on `root`: when the task ends, for any
/// reason, the whole listener is cancelled.
fn spawn_linked<F>(runtime: &Handle, root: &CancellationToken, fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let guard = root.clone().drop_guard();
    runtime.spawn(async move {
        let _guard = guard;
        fut.await
    })
}

impl Drop for BaseListener {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

impl std::fmt::Display for BaseListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.config.name)
    }
}

impl std::fmt::Debug for BaseListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseListener")
            .field("name", &self.config.name)
            .field("mode", &self.config.mode)
            .field("state", &self.state())
            .field("endpoint", &self.client.endpoint())
            .finish()
    }
}

#[async_trait]
impl Listener for BaseListener {
    fn start(&mut self) -> Result<(), ListenerError> {
        BaseListener::start(self)
    }

    async fn stop(&mut self) -> Result<(), ListenerError> {
        BaseListener::stop(self).await
    }

    fn name(&self) -> &str {
        BaseListener::name(self)
    }

    fn set_logger(&self, logger: Logger) {
        BaseListener::set_logger(self, logger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Subscription;
    use crate::config::ListenerBuilder;
    use crate::queue::MemoryQueue;
    use crate::types::{BlockSelector, Header};
    use std::sync::atomic::{AtomicU64, AtomicUsize};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct TickClient {
        calls: AtomicU64,
    }

    #[async_trait]
    impl ChainClient for TickClient {
        async fn header_by_number(
            &self,
            _selector: BlockSelector,
        ) -> Result<Option<Header>, ChainClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(Header {
                number: n,
                hash: format!("0x{n:x}"),
                parent_hash: format!("0x{:x}", n - 1),
                timestamp: 0,
            }))
        }

        fn endpoint(&self) -> &str {
            "tick"
        }
    }

    /// Subscription whose feed fails immediately.
    struct BrokenFeed;

    #[async_trait]
    impl Subscription for BrokenFeed {
        async fn err(&mut self) -> ChainClientError {
            ChainClientError::Subscription("connection reset by peer".into())
        }

        fn unsubscribe(&mut self) {}
    }

    struct BrokenPushClient;

    #[async_trait]
    impl ChainClient for BrokenPushClient {
        async fn header_by_number(
            &self,
            _selector: BlockSelector,
        ) -> Result<Option<Header>, ChainClientError> {
            Ok(None)
        }

        async fn subscribe_new_head(
            &self,
            _sink: DeliverySender,
        ) -> Result<Box<dyn Subscription>, ChainClientError> {
            Ok(Box::new(BrokenFeed))
        }

        fn endpoint(&self) -> &str {
            "broken-push"
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<u64>>);

    #[async_trait]
    impl HeaderHook for Collect {
        async fn process_header(&self, header: &Header) -> Result<(), ListenerError> {
            self.0.lock().unwrap().push(header.number);
            Ok(())
        }
    }

    fn listener_with(
        client: Arc<dyn ChainClient>,
        mode: AcquisitionMode,
    ) -> (BaseListener, Arc<Collect>) {
        let hook = Arc::new(Collect::default());
        let config = ListenerBuilder::new()
            .name("test")
            .poll_interval_ms(100)
            .mode(mode)
            .shutdown_timeout_ms(1_000)
            .build_config();
        let listener = BaseListener::new(
            config,
            move || Ok(client),
            Arc::new(MemoryQueue::new()),
            hook.clone(),
        )
        .unwrap();
        (listener, hook)
    }

    #[test]
    fn failing_client_factory_aborts_construction() {
        let factory_calls = AtomicUsize::new(0);
        let result = BaseListener::new(
            ListenerConfig::default(),
            || {
                factory_calls.fetch_add(1, Ordering::SeqCst);
                Err(ChainClientError::Unavailable("no root chain RPC configured".into()))
            },
            Arc::new(MemoryQueue::new()),
            Arc::new(Collect::default()),
        );
        assert!(matches!(result, Err(ListenerError::ChainClient(_))));
        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalid_config_is_rejected_before_factory() {
        let config = ListenerBuilder::new().poll_interval_ms(0).build_config();
        let result = BaseListener::new(
            config,
            || -> Result<Arc<dyn ChainClient>, ChainClientError> {
                panic!("factory must not run for an invalid config")
            },
            Arc::new(MemoryQueue::new()),
            Arc::new(Collect::default()),
        );
        assert!(matches!(result, Err(ListenerError::InvalidConfig(_))));
    }

    #[test]
    fn start_outside_runtime_is_reported() {
        let (mut listener, _) =
            listener_with(Arc::new(TickClient::default()), AcquisitionMode::Polling);
        assert!(matches!(listener.start(), Err(ListenerError::NoRuntime)));
        assert_eq!(listener.state(), ListenerState::Created);
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_transitions_are_guarded() {
        let (mut listener, _) =
            listener_with(Arc::new(TickClient::default()), AcquisitionMode::Polling);
        assert_eq!(listener.state(), ListenerState::Created);
        assert!(matches!(listener.stop().await, Err(ListenerError::NotStarted)));

        listener.start().unwrap();
        assert_eq!(listener.state(), ListenerState::Started);
        assert!(!listener.is_finished());
        assert!(matches!(listener.start(), Err(ListenerError::AlreadyStarted)));

        listener.stop().await.unwrap();
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(listener.is_finished());
        assert!(matches!(listener.stop().await, Err(ListenerError::AlreadyStopped)));
        assert!(matches!(listener.start(), Err(ListenerError::AlreadyStopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_listener_delivers_in_order() {
        let (mut listener, hook) =
            listener_with(Arc::new(TickClient::default()), AcquisitionMode::Polling);
        listener.start().unwrap();

        tokio::time::sleep(Duration::from_millis(550)).await;
        listener.stop().await.unwrap();

        let seen = hook.0.lock().unwrap().clone();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        // the processing task has been joined and dropped its clone
        assert_eq!(Arc::strong_count(&hook), 2);
    }

    /// Hook that never returns.
    struct Stuck;

    #[async_trait]
    impl HeaderHook for Stuck {
        async fn process_header(&self, _header: &Header) -> Result<(), ListenerError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_timeout_aborts_and_joins_tasks() {
        let hook = Arc::new(Stuck);
        let config = ListenerBuilder::new()
            .name("stuck")
            .poll_interval_ms(100)
            .shutdown_timeout_ms(200)
            .build_config();
        let client: Arc<dyn ChainClient> = Arc::new(TickClient::default());
        let mut listener = BaseListener::new(
            config,
            move || Ok(client),
            Arc::new(MemoryQueue::new()),
            hook.clone(),
        )
        .unwrap();
        listener.start().unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!listener.is_finished());
        assert_eq!(Arc::strong_count(&hook), 3);

        let err = listener.stop().await.unwrap_err();
        assert!(matches!(err, ListenerError::ShutdownTimeout { ms: 200, .. }));
        assert!(listener.is_finished());
        assert_eq!(Arc::strong_count(&hook), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_processing_tears_down_acquisition() {
        let (mut listener, _) =
            listener_with(Arc::new(TickClient::default()), AcquisitionMode::Polling);
        assert!(!listener.cancel_processing());
        listener.start().unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(listener.cancel_processing());

        tokio::time::timeout(Duration::from_secs(1), listener.closed())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(listener.is_finished());
        listener.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_acquisition_tears_down_processing() {
        let (mut listener, _) =
            listener_with(Arc::new(TickClient::default()), AcquisitionMode::Polling);
        listener.start().unwrap();
        assert!(listener.cancel_acquisition());

        tokio::time::timeout(Duration::from_secs(1), listener.closed())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(listener.is_finished());
    }

    #[tokio::test]
    async fn subscription_error_closes_listener() {
        let (mut listener, hook) =
            listener_with(Arc::new(BrokenPushClient), AcquisitionMode::Subscription);
        listener.start().unwrap();

        tokio::time::timeout(Duration::from_secs(1), listener.closed())
            .await
            .unwrap();
        listener.stop().await.unwrap();
        assert!(listener.is_finished());
        assert!(hook.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn logger_can_be_replaced_after_start() {
        let (mut listener, _) =
            listener_with(Arc::new(TickClient::default()), AcquisitionMode::Polling);
        listener.start().unwrap();
        listener.set_logger(tracing::Span::none());
        assert!(listener.logger().is_none());
        assert_eq!(listener.to_string(), "test");
        listener.stop().await.unwrap();
    }
}
