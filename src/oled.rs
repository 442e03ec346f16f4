// SSD1306 128x64 OLED on the shared I2C bus (address 0x3C)
// Executes the shared crate's draw commands into the frame buffer and pushes
// it to the panel on `Flush`.

use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_9X15};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, Line, PrimitiveStyle};
use embedded_graphics::text::{Baseline, Text};
use embedded_hal::i2c::I2c;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::{Brightness, DisplayConfig, DisplayRotation, DisplaySize128x64, I2CInterface};
use ssd1306::{I2CDisplayInterface, Ssd1306};

use log::{debug, info};

use climate_node_shared::display::{DisplaySink, DrawCommand, TextSize};
use climate_node_shared::NodeError;

// Phase-1/phase-2 precharge period used with custom contrast
const PRECHARGE: u8 = 0x1;

type Panel<I> =
    Ssd1306<I2CInterface<I>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

pub struct OledDisplay<I> {
    panel: Panel<I>,
}

impl<I: I2c> OledDisplay<I> {
    pub fn new(i2c: I) -> Self {
        let interface = I2CDisplayInterface::new(i2c);
        let panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        Self { panel }
    }
}

fn draw_error(e: impl core::fmt::Debug) -> NodeError {
    NodeError::Io(format!("oled draw failed: {:?}", e))
}

impl<I: I2c> DisplaySink for OledDisplay<I> {
    fn init(&mut self, contrast: u8) -> Result<(), NodeError> {
        self.panel
            .init()
            .map_err(|e| NodeError::DisplayInitFailure(format!("{:?}", e)))?;
        self.panel
            .set_brightness(Brightness::custom(PRECHARGE, contrast))
            .map_err(|e| NodeError::DisplayInitFailure(format!("{:?}", e)))?;
        info!("🖥️ OLED initialised, contrast {}", contrast);
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<(), NodeError> {
        debug!("🖥️ OLED power {}", if on { "on" } else { "off" });
        self.panel.set_display_on(on).map_err(draw_error)
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<(), NodeError> {
        let stroke = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
        match command {
            DrawCommand::Clear => self.panel.clear_buffer(),
            DrawCommand::Text { x, y, size, text } => {
                let font = match size {
                    TextSize::Small => &FONT_6X10,
                    TextSize::Large => &FONT_9X15,
                };
                let style = MonoTextStyle::new(font, BinaryColor::On);
                Text::with_baseline(text, Point::new(*x, *y), style, Baseline::Top)
                    .draw(&mut self.panel)
                    .map_err(draw_error)?;
            }
            DrawCommand::Line { x0, y0, x1, y1 } => {
                Line::new(Point::new(*x0, *y0), Point::new(*x1, *y1))
                    .into_styled(stroke)
                    .draw(&mut self.panel)
                    .map_err(draw_error)?;
            }
            DrawCommand::Circle { cx, cy, radius } => {
                let diameter = radius.saturating_mul(2).saturating_add(1);
                Circle::with_center(Point::new(*cx, *cy), diameter)
                    .into_styled(stroke)
                    .draw(&mut self.panel)
                    .map_err(draw_error)?;
            }
            DrawCommand::Flush => self.panel.flush().map_err(draw_error)?,
        }
        Ok(())
    }
}
