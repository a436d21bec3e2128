//! The application window.
//!
//! Everything runs on the main thread: the event loop wakes up once per tick interval, lets the
//! [`App`] process a frame and presents the resulting canvas.

mod renderer;

use std::{
    rc::Rc,
    time::{Duration, Instant},
};

use winit::{
    event::{Event, StartCause, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
};

use crate::app::{App, CANVAS_RES};
use crate::config::StartupError;

use self::renderer::{Gpu, Renderer, Window};

pub const WINDOW_TITLE: &str = "Monkey Pose Mimic";

/// Opens the window and runs `app` until the window is closed.
///
/// On success, this does not return: the process exits with code 0 once the window is closed,
/// after the app has released its resources. An error is returned if the window cannot be set
/// up.
pub fn run(mut app: App, interval: Duration) -> Result<(), StartupError> {
    let event_loop = EventLoop::new();
    let gpu = pollster::block_on(Gpu::open()).map_err(StartupError::Window)?;
    let window = Window::open(&event_loop, WINDOW_TITLE, CANVAS_RES).map_err(StartupError::Window)?;
    let mut renderer = Renderer::new(window, Rc::new(gpu)).map_err(StartupError::Window)?;

    log::info!("running at one tick every {:?}", interval);
    event_loop.run(move |event, _target, flow| match event {
        Event::NewEvents(StartCause::Init | StartCause::ResumeTimeReached { .. }) => {
            app.tick();
            let canvas = app.canvas();
            renderer.update_texture(canvas.resolution(), canvas.data());
            renderer.window().request_redraw();
            *flow = ControlFlow::WaitUntil(Instant::now() + interval);
        }
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => {
            log::info!("window closed");
            *flow = ControlFlow::ExitWithCode(0);
        }
        Event::RedrawRequested(_) => renderer.redraw(),
        Event::LoopDestroyed => app.shutdown(),
        _ => {}
    })
}
