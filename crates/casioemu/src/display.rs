//! Calculator Screen Rendering Module
//!
//! Composites the emulator's per-frame draw calls into a window using winit
//! for window management and softbuffer for software rendering. Sprites are
//! drawn as flat ink rectangles blended over the glass colour; the model's
//! sprite sheet itself is not loaded.

use crate::core::EmulatorCore;
use crate::render::{Colour, DrawCall};
use casioemu_hw::specs::timing::FRAME_INTERVAL_MS;
use softbuffer::{Context, Surface};
use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::Window;

// ================================================================================================
// Window Layout Constants
// ================================================================================================

/// Border size around the glass in canvas pixels
const BORDER_SIZE: u32 = 4;

/// Window pixels per canvas pixel
const SCALE: u32 = 2;

/// Border color in RGB format (dark grey: 0x333333)
const BORDER_COLOR: u32 = 0x333333;

/// Unlit LCD glass
const GLASS_COLOR: Colour = Colour::new(0xC6, 0xCE, 0xB4);

// ================================================================================================
// Display Timing Constants
// ================================================================================================

/// Peripheral ticks run between two frames
const TICKS_PER_FRAME: usize = 64;

/// Window layout for a canvas of the given size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    canvas_width: u32,
    canvas_height: u32,
}

impl Layout {
    fn window_width(&self) -> u32 {
        (self.canvas_width + BORDER_SIZE * 2) * SCALE
    }

    fn window_height(&self) -> u32 {
        (self.canvas_height + BORDER_SIZE * 2) * SCALE
    }
}

/// Emulator display application
pub struct EmulatorDisplay {
    emulator: EmulatorCore,
    layout: Layout,

    // Display state
    window: Option<Rc<Window>>,
    surface: Option<Surface<Rc<Window>, Rc<Window>>>,

    next_frame: Instant,
}

impl EmulatorDisplay {
    pub fn new(emulator: EmulatorCore) -> Self {
        let (rows, columns) = emulator.display_geometry();
        let (canvas_width, canvas_height) = emulator.model().canvas_size(rows, columns);
        Self {
            emulator,
            layout: Layout {
                canvas_width,
                canvas_height,
            },
            window: None,
            surface: None,
            next_frame: Instant::now(),
        }
    }

    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        info!("=== Emulation Stopped ===");
        self.emulator.print_final_state();
        self.emulator.shutdown();
        event_loop.exit();
    }
}

impl ApplicationHandler for EmulatorDisplay {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let (width, height) = (self.layout.window_width(), self.layout.window_height());
        let attributes = Window::default_attributes()
            .with_title(format!("casioemu - {}", self.emulator.model().model_name))
            .with_resizable(false)
            .with_inner_size(winit::dpi::PhysicalSize::new(width, height));

        let surface = event_loop
            .create_window(attributes)
            .map_err(|e| e.to_string())
            .map(Rc::new)
            .and_then(|window| {
                let context = Context::new(window.clone()).map_err(|e| e.to_string())?;
                let mut surface =
                    Surface::new(&context, window.clone()).map_err(|e| e.to_string())?;
                let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
                    return Err("empty window".to_string());
                };
                surface.resize(w, h).map_err(|e| e.to_string())?;
                Ok((window, surface))
            });

        match surface {
            Ok((window, surface)) => {
                // Kick off the first frame
                window.request_redraw();
                self.window = Some(window);
                self.surface = Some(surface);
            }
            Err(e) => {
                error!("Failed to create window: {}", e);
                self.stop(event_loop);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.stop(event_loop),
            WindowEvent::RedrawRequested => {
                let draw_calls = self.emulator.frame();
                if let Some(surface) = self.surface.as_mut()
                    && let Err(e) = Self::render(surface, self.layout, &draw_calls)
                {
                    error!("Failed to present frame: {}", e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.emulator.is_running() {
            return;
        }
        for _ in 0..TICKS_PER_FRAME {
            self.emulator.tick();
        }

        let now = Instant::now();
        if now >= self.next_frame {
            self.next_frame = now + Duration::from_millis(FRAME_INTERVAL_MS);
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
    }
}

impl EmulatorDisplay {
    fn render(
        surface: &mut Surface<Rc<Window>, Rc<Window>>,
        layout: Layout,
        draw_calls: &[DrawCall],
    ) -> Result<(), softbuffer::SoftBufferError> {
        let mut buffer = surface.buffer_mut()?;
        composite(&mut buffer, layout, draw_calls);
        buffer.present()
    }
}

/// Paint the border, the glass and every draw call into `buffer`
fn composite(buffer: &mut [u32], layout: Layout, draw_calls: &[DrawCall]) {
    let width = layout.window_width();

    // Fill with border color, then the glass
    buffer.fill(BORDER_COLOR);
    let glass = GLASS_COLOR.to_rgb();
    for y in 0..layout.canvas_height {
        for x in 0..layout.canvas_width {
            paint(buffer, width, x, y, |_| glass);
        }
    }

    for call in draw_calls {
        if call.alpha == 0 {
            continue;
        }
        let dest = call.dest;
        for y in dest.y.max(0)..(dest.y + dest.h).max(0) {
            for x in dest.x.max(0)..(dest.x + dest.w).max(0) {
                let (x, y) = (x as u32, y as u32);
                if x >= layout.canvas_width || y >= layout.canvas_height {
                    continue;
                }
                paint(buffer, width, x, y, |under| {
                    blend(under, call.colour, call.alpha)
                });
            }
        }
    }
}

/// Apply `shade` to the window pixels covering canvas pixel (x, y)
fn paint(buffer: &mut [u32], width: u32, x: u32, y: u32, shade: impl Fn(u32) -> u32) {
    let origin_x = (BORDER_SIZE + x) * SCALE;
    let origin_y = (BORDER_SIZE + y) * SCALE;
    for dy in 0..SCALE {
        for dx in 0..SCALE {
            let idx = ((origin_y + dy) * width + origin_x + dx) as usize;
            if let Some(pixel) = buffer.get_mut(idx) {
                *pixel = shade(*pixel);
            }
        }
    }
}

/// Blend `colour` at `alpha` over the 0xRRGGBB pixel `under`
fn blend(under: u32, colour: Colour, alpha: u8) -> u32 {
    let alpha = alpha as u32;
    let mix = |over: u8, shift: u32| {
        let under = (under >> shift) & 0xFF;
        (over as u32 * alpha + under * (255 - alpha)) / 255
    };
    (mix(colour.r, 16) << 16) | (mix(colour.g, 8) << 8) | mix(colour.b, 0)
}

pub fn run(emulator: EmulatorCore) -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;
    let mut app = EmulatorDisplay::new(emulator);
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Rect;

    #[test]
    fn test_blend_endpoints() {
        let ink = Colour::new(0x10, 0x20, 0x30);
        assert_eq!(blend(0xFFFFFF, ink, 0), 0xFFFFFF);
        assert_eq!(blend(0xFFFFFF, ink, 255), 0x102030);
    }

    #[test]
    fn test_composite_scales_and_clips() {
        let layout = Layout {
            canvas_width: 4,
            canvas_height: 2,
        };
        let width = layout.window_width();
        let mut buffer = vec![0; (width * layout.window_height()) as usize];
        let call = DrawCall {
            sprite: "rsd_pixel",
            src: Rect::new(0, 0, 3, 3),
            dest: Rect::new(3, 1, 3, 3),
            alpha: 255,
            colour: Colour::new(0, 0, 0),
        };
        composite(&mut buffer, layout, &[call]);

        let at = |x: u32, y: u32| buffer[(y * width + x) as usize];
        assert_eq!(at(0, 0), BORDER_COLOR);
        let glass = ((BORDER_SIZE) * SCALE, (BORDER_SIZE) * SCALE);
        assert_eq!(at(glass.0, glass.1), GLASS_COLOR.to_rgb());
        // Canvas pixel (3, 1) is inked, the rest of the call is clipped
        let inked = ((BORDER_SIZE + 3) * SCALE + 1, (BORDER_SIZE + 1) * SCALE + 1);
        assert_eq!(at(inked.0, inked.1), 0x000000);
        let below = ((BORDER_SIZE + 3) * SCALE, (BORDER_SIZE + 2) * SCALE);
        assert_eq!(at(below.0, below.1), BORDER_COLOR);
    }
}
