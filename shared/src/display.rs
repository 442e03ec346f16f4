// Display Renderer
// Pure mapping from readings to draw calls for the 128x64 OLED, plus the
// presentation step that powers the panel on or off.

use crate::error::NodeError;
use crate::retention::RetentionState;

const EMPTY_MILLIVOLT_CENTS: f32 = 330.0; // 3.30 V = 0 %
const BAND_CENTS: f32 = 90.0; // 3.30 V .. 4.20 V

pub const DISPLAY_WIDTH: i32 = 128;
pub const DISPLAY_HEIGHT: i32 = 64;

const RULE_Y: i32 = 10;
const TEMPERATURE_Y: i32 = 14;
const HUMIDITY_Y: i32 = 32;
const STATUS_Y: i32 = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSize {
    Small, // 6x10 font
    Large, // 9x15 font
}

impl TextSize {
    /// Glyph cell as (width, height) in pixels; the panel driver picks fonts
    /// with exactly these cells
    pub const fn glyph(self) -> (i32, i32) {
        match self {
            TextSize::Small => (6, 10),
            TextSize::Large => (9, 15),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Text {
        x: i32,
        y: i32,
        size: TextSize,
        text: String,
    },
    Line {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
    },
    Circle {
        cx: i32,
        cy: i32,
        radius: u32,
    },
    Flush,
}

/// Draw-call surface of the panel driver
pub trait DisplaySink {
    /// Bring up the controller and apply contrast
    fn init(&mut self, contrast: u8) -> Result<(), NodeError>;
    fn set_power(&mut self, on: bool) -> Result<(), NodeError>;
    fn draw(&mut self, command: &DrawCommand) -> Result<(), NodeError>;
}

/// Linear 3.30 V..4.20 V band, clamped to 0..=100
pub fn battery_percent(voltage: f32) -> u8 {
    if !voltage.is_finite() {
        return 0;
    }
    let percent = ((voltage * 100.0 - EMPTY_MILLIVOLT_CENTS) * 100.0 / BAND_CENTS).round();
    percent.clamp(0.0, 100.0) as u8
}

/// What the screen shows this boot
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenView<'a> {
    pub battery_voltage: f32,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub status: Option<&'a str>,
}

impl<'a> ScreenView<'a> {
    pub fn from_state(state: &RetentionState, status: Option<&'a str>) -> Self {
        Self {
            battery_voltage: state.last_battery_voltage,
            temperature_c: state.last_temperature_c,
            humidity_pct: state.last_humidity_pct,
            status,
        }
    }
}

pub fn render(view: &ScreenView<'_>) -> Vec<DrawCommand> {
    let temperature = format!("{:.1}", view.temperature_c);
    let (large_width, _) = TextSize::Large.glyph();
    let mut commands = vec![
        DrawCommand::Clear,
        DrawCommand::Text {
            x: 0,
            y: 0,
            size: TextSize::Small,
            text: format!("Bat:{:.2}V", view.battery_voltage),
        },
        DrawCommand::Text {
            x: 80,
            y: 0,
            size: TextSize::Small,
            text: format!("{}%", battery_percent(view.battery_voltage)),
        },
        DrawCommand::Line {
            x0: 0,
            y0: RULE_Y,
            x1: DISPLAY_WIDTH,
            y1: RULE_Y,
        },
        DrawCommand::Text {
            x: 0,
            y: TEMPERATURE_Y,
            size: TextSize::Large,
            text: format!("{} C", temperature),
        },
        // Degree sign, in the blank cell before the unit
        DrawCommand::Circle {
            cx: temperature.len() as i32 * large_width + large_width / 2,
            cy: TEMPERATURE_Y + 2,
            radius: 2,
        },
        DrawCommand::Text {
            x: 0,
            y: HUMIDITY_Y,
            size: TextSize::Large,
            text: format!("{:.1} %", view.humidity_pct),
        },
    ];

    if let Some(status) = view.status {
        commands.push(DrawCommand::Text {
            x: 0,
            y: STATUS_Y,
            size: TextSize::Small,
            text: status.to_string(),
        });
    }

    commands.push(DrawCommand::Flush);
    commands
}

/// Push the current state to the panel. A disabled display is explicitly
/// powered off every time so the result does not depend on its prior state.
pub fn present(
    sink: &mut dyn DisplaySink,
    state: &RetentionState,
    status: Option<&str>,
) -> Result<(), NodeError> {
    if !state.display_enabled {
        return sink.set_power(false);
    }

    sink.set_power(true)?;
    for command in render(&ScreenView::from_state(state, status)) {
        sink.draw(&command)?;
    }
    Ok(())
}

/// Two-line notice used while the configuration portal is running
pub fn render_notice(title: &str, detail: &str) -> Vec<DrawCommand> {
    vec![
        DrawCommand::Clear,
        DrawCommand::Text {
            x: 0,
            y: 0,
            size: TextSize::Large,
            text: title.to_string(),
        },
        DrawCommand::Line {
            x0: 0,
            y0: 22,
            x1: DISPLAY_WIDTH,
            y1: 22,
        },
        DrawCommand::Text {
            x: 0,
            y: 30,
            size: TextSize::Small,
            text: detail.to_string(),
        },
        DrawCommand::Flush,
    ]
}

pub fn present_notice(sink: &mut dyn DisplaySink, title: &str, detail: &str) -> Result<(), NodeError> {
    sink.set_power(true)?;
    for command in render_notice(title, detail) {
        sink.draw(&command)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingDisplay;

    #[test]
    fn percent_band_edges() {
        assert_eq!(battery_percent(3.30), 0);
        assert_eq!(battery_percent(3.75), 50);
        assert_eq!(battery_percent(4.20), 100);
    }

    #[test]
    fn percent_clamps_outside_band() {
        assert_eq!(battery_percent(2.9), 0);
        assert_eq!(battery_percent(0.0), 0);
        assert_eq!(battery_percent(4.5), 100);
        assert_eq!(battery_percent(f32::NAN), 0);
    }

    #[test]
    fn percent_is_monotonic_inside_band() {
        let mut previous = 0;
        for step in 0..=900 {
            let voltage = 3.30 + step as f32 * 0.001;
            let percent = battery_percent(voltage);
            assert!(percent >= previous, "dropped at {} V", voltage);
            assert!(percent <= 100);
            previous = percent;
        }
    }

    #[test]
    fn layout_matches_panel_positions() {
        let view = ScreenView {
            battery_voltage: 3.87,
            temperature_c: 21.44,
            humidity_pct: 55.16,
            status: None,
        };
        let commands = render(&view);

        assert_eq!(commands.first(), Some(&DrawCommand::Clear));
        assert_eq!(commands.last(), Some(&DrawCommand::Flush));
        assert!(commands.contains(&DrawCommand::Text {
            x: 0,
            y: 0,
            size: TextSize::Small,
            text: "Bat:3.87V".into()
        }));
        assert!(commands.contains(&DrawCommand::Text {
            x: 80,
            y: 0,
            size: TextSize::Small,
            text: "63%".into()
        }));
        assert!(commands.contains(&DrawCommand::Text {
            x: 0,
            y: 14,
            size: TextSize::Large,
            text: "21.4 C".into()
        }));
        assert!(commands.contains(&DrawCommand::Circle {
            cx: 40,
            cy: 16,
            radius: 2
        }));
        assert!(commands.contains(&DrawCommand::Text {
            x: 0,
            y: 32,
            size: TextSize::Large,
            text: "55.2 %".into()
        }));
    }

    /// Pixel box (left, top, right, bottom) covered by each text command
    fn text_boxes(commands: &[DrawCommand]) -> Vec<(String, i32, i32, i32, i32)> {
        commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Text { x, y, size, text } => {
                    let (w, h) = size.glyph();
                    let right = x + w * text.chars().count() as i32;
                    Some((text.clone(), *x, *y, right, y + h))
                }
                _ => None,
            })
            .collect()
    }

    fn assert_text_fits_without_overlap(commands: &[DrawCommand]) {
        let boxes = text_boxes(commands);
        for (text, left, top, right, bottom) in &boxes {
            assert!(*left >= 0 && *top >= 0, "{} starts off panel", text);
            assert!(*right <= DISPLAY_WIDTH, "{} runs past column {}", text, right);
            assert!(*bottom <= DISPLAY_HEIGHT, "{} runs past row {}", text, bottom);
        }
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                let apart = a.3 <= b.1 || b.3 <= a.1 || a.4 <= b.2 || b.4 <= a.2;
                assert!(apart, "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn text_rows_stay_on_panel_and_apart() {
        for status in [None, Some("WiFi timeout"), Some("Sensor error"), Some("Publish failed")] {
            let view = ScreenView {
                battery_voltage: 4.2,
                temperature_c: -40.0,
                humidity_pct: 100.0,
                status,
            };
            assert_text_fits_without_overlap(&render(&view));
        }
        assert_text_fits_without_overlap(&render_notice("Setup", "AP ClimateNode-Setup"));
    }

    #[test]
    fn rule_and_degree_sign_clear_of_readings() {
        let commands = render(&ScreenView::from_state(&RetentionState::new(), None));
        let boxes = text_boxes(&commands);
        let humidity_top = boxes.iter().find(|b| b.0.ends_with('%') && b.1 == 0).unwrap().2;

        for command in &commands {
            match command {
                DrawCommand::Line { y0, .. } => assert!(*y0 < TEMPERATURE_Y),
                DrawCommand::Circle { cy, radius, .. } => {
                    assert!(cy + (*radius as i32) < humidity_top)
                }
                _ => {}
            }
        }
    }

    #[test]
    fn status_line_only_when_present() {
        let mut view = ScreenView::from_state(&RetentionState::new(), None);
        let without = render(&view);
        view.status = Some("WiFi timeout");
        let with = render(&view);

        assert_eq!(with.len(), without.len() + 1);
        assert!(with.contains(&DrawCommand::Text {
            x: 0,
            y: 52,
            size: TextSize::Small,
            text: "WiFi timeout".into()
        }));
    }

    #[test]
    fn disabled_display_is_powered_off_without_drawing() {
        let mut sink = RecordingDisplay::default();
        let state = RetentionState::new();

        present(&mut sink, &state, None).unwrap();
        present(&mut sink, &state, None).unwrap();

        assert_eq!(sink.power, vec![false, false]);
        assert!(sink.commands.is_empty());
    }

    #[test]
    fn enabled_display_is_powered_on_and_drawn() {
        let mut sink = RecordingDisplay::default();
        let mut state = RetentionState::new();
        state.display_enabled = true;

        present(&mut sink, &state, None).unwrap();

        assert_eq!(sink.power, vec![true]);
        assert_eq!(sink.commands.last(), Some(&DrawCommand::Flush));
    }

    #[test]
    fn notice_powers_panel_and_draws_detail() {
        let mut sink = RecordingDisplay::default();
        present_notice(&mut sink, "Setup", "AP ClimateNode-Setup").unwrap();

        assert_eq!(sink.power, vec![true]);
        assert!(sink.commands.contains(&DrawCommand::Text {
            x: 0,
            y: 30,
            size: TextSize::Small,
            text: "AP ClimateNode-Setup".into()
        }));
    }
}
