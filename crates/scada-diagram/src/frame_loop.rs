//! Per-frame animation driver.
//!
//! Draws the current store snapshot on a fixed tick, independent of when
//! data arrives. A frame never waits for data: it renders whatever snapshot
//! is current (or only the background) and moves on.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use scada_dashboard::DashboardStore;
use scada_telemetry::Metrics;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::canvas::Canvas;
use crate::clock::Clock;
use crate::renderer::DiagramRenderer;
use crate::svg::SvgCanvas;

/// Periodic SVG snapshot of the diagram.
#[derive(Debug, Clone)]
pub struct SvgExport {
    pub path: PathBuf,
    pub interval: Duration,
}

/// Highest frame rate the loop runs at; larger settings are capped.
pub const MAX_FPS: u32 = 240;

/// Frame loop settings.
#[derive(Debug, Clone)]
pub struct FrameLoopConfig {
    pub fps: u32,
    pub svg_export: Option<SvgExport>,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            svg_export: None,
        }
    }
}

impl FrameLoopConfig {
    /// Period between frames. Always non-zero: fps is clamped to `1..=MAX_FPS`.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.fps.clamp(1, MAX_FPS)))
    }
}

/// Drives a renderer onto a shared canvas.
pub struct FrameLoop;

impl FrameLoop {
    /// Spawn the loop. The canvas is locked once per frame.
    pub fn spawn<C>(
        renderer: DiagramRenderer,
        store: DashboardStore,
        canvas: Arc<Mutex<C>>,
        clock: Arc<dyn Clock>,
        config: FrameLoopConfig,
    ) -> FrameLoopHandle
    where
        C: Canvas + Send + 'static,
    {
        let renderer = Arc::new(RwLock::new(renderer));
        let frames = Arc::new(AtomicU64::new(0));
        let shutdown = CancellationToken::new();

        let task = {
            let renderer = renderer.clone();
            let frames = frames.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let period = config.frame_interval();
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                let mut export = config
                    .svg_export
                    .map(|e| (e, Instant::now()));

                info!(fps = config.fps, "Frame loop started");

                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        _ = ticker.tick() => {}
                    }

                    let snapshot = store.current();
                    let now_ms = clock.now_ms();
                    let current = *renderer.read();

                    current.draw(snapshot.as_deref(), now_ms, &mut *canvas.lock());
                    frames.fetch_add(1, Ordering::Relaxed);
                    Metrics::frame_drawn(snapshot.as_ref().map_or(0, |s| s.lines.len()));

                    if let Some((target, last)) = export.as_mut() {
                        if last.elapsed() >= target.interval {
                            *last = Instant::now();
                            let mut svg = SvgCanvas::new();
                            current.draw(snapshot.as_deref(), now_ms, &mut svg);
                            match svg.write_to(&target.path).await {
                                Ok(()) => debug!(path = %target.path.display(), "Diagram exported"),
                                Err(e) => warn!(error = %e, path = %target.path.display(), "Diagram export failed"),
                            }
                        }
                    }
                }

                info!("Frame loop stopped");
            })
        };

        FrameLoopHandle {
            renderer,
            frames,
            shutdown,
            task,
        }
    }
}

/// Handle to a running frame loop.
pub struct FrameLoopHandle {
    renderer: Arc<RwLock<DiagramRenderer>>,
    frames: Arc<AtomicU64>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl FrameLoopHandle {
    /// Follow a container resize; takes effect on the next frame.
    pub fn resize(&self, parent_width: f64) -> bool {
        self.renderer.write().resize(parent_width)
    }

    pub fn renderer(&self) -> DiagramRenderer {
        *self.renderer.read()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Stop and wait for the current frame to finish.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }
}
