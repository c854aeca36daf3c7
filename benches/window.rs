use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use roost::logging::{LogEvent, LogSink};
use roost::{
    EventListener, HandlerResult, HandlerSet, KeyInfo, KeyPressEvent, LoggingResult, Logger,
    RecordingSurface, SquareStructure, StructureRenderer, Structure, TextStructure,
    WindowActivateEvent, Window, WindowConfig,
};

#[derive(Clone, Default)]
struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _event: &LogEvent) -> LoggingResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct KeyTally {
    presses: u64,
    activations: u64,
}

impl EventListener for KeyTally {
    fn declare_handlers(handlers: &mut HandlerSet<Self>) {
        handlers
            .on("on_press", |tally: &mut KeyTally, _: &KeyPressEvent| -> HandlerResult {
                tally.presses += 1;
                Ok(())
            })
            .on("on_activate", |tally: &mut KeyTally, _: &WindowActivateEvent| {
                tally.activations += 1;
                Ok(())
            });
    }
}

fn bench_window() -> Window {
    let mut config = WindowConfig::default().with_logger(Logger::new(NullSink));
    config.tick_interval = Duration::from_secs(3600);
    config.metrics_interval = Duration::ZERO;
    Window::with_config(config)
}

fn dispatch_key_presses(c: &mut Criterion) {
    let window = bench_window();
    for _ in 0..8 {
        window.add_event_listener(KeyTally::default());
    }
    window.open().expect("open");
    let source = window.downgrade();

    c.bench_function("dispatch_key_press_8_listeners", |b| {
        b.iter(|| {
            let event = KeyPressEvent::new(source.clone(), KeyInfo::new('a', 65, false));
            black_box(window.call_event(event).expect("dispatch"));
        });
    });

    window.close_default(false).expect("close");
}

fn render_pass(c: &mut Criterion) {
    let structures: Vec<Structure> = (0..64)
        .map(|i| {
            if i % 2 == 0 {
                SquareStructure::new(i, i, 10, 4).into()
            } else {
                TextStructure::new(i, i, format!("label {i}")).into()
            }
        })
        .collect();
    let mut surface = RecordingSurface::new(200, 100);
    let mut renderer = StructureRenderer::with_default();

    c.bench_function("render_pass_64_structures", |b| {
        b.iter(|| {
            surface.reset();
            black_box(renderer.render(&mut surface, black_box(&structures)));
        });
    });
}

criterion_group!(benches, dispatch_key_presses, render_pass);
criterion_main!(benches);
