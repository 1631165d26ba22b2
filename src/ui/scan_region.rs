/// Viewfinder overlay for QR mode
/// Shades the region outside the detection box and outlines the box itself
use iced::widget::canvas::{self, Path, Stroke};
use iced::{Color, Point, Rectangle, Size};

use crate::qr::scanner::{ScanBox, REGION_MIN_HEIGHT};

/// Overlay drawn on top of the scan region
#[derive(Debug, Clone, Copy)]
pub struct ScanOverlay {
    pub qrbox: ScanBox,
    /// Outline turns green once a code was read
    pub decoded: bool,
}

impl ScanOverlay {
    /// Detection box inside `bounds`, centred and scaled with the region height
    pub fn detection_rect(&self, bounds: Size) -> Rectangle {
        let scale = bounds.height / REGION_MIN_HEIGHT;
        let width = (self.qrbox.width as f32 * scale).min(bounds.width);
        let height = (self.qrbox.height as f32 * scale).min(bounds.height);

        Rectangle {
            x: (bounds.width - width) / 2.0,
            y: (bounds.height - height) / 2.0,
            width,
            height,
        }
    }
}

impl<Message> canvas::Program<Message> for ScanOverlay {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &iced::Theme,
        bounds: Rectangle,
        _cursor: iced::mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let size = bounds.size();
        if size.width < 1.0 || size.height < 1.0 {
            return vec![frame.into_geometry()];
        }

        let window = self.detection_rect(size);
        let shade = Color::from_rgba(0.0, 0.0, 0.0, 0.45);

        // Four bands around the window
        frame.fill_rectangle(Point::ORIGIN, Size::new(size.width, window.y), shade);
        frame.fill_rectangle(
            Point::new(0.0, window.y + window.height),
            Size::new(size.width, size.height - window.y - window.height),
            shade,
        );
        frame.fill_rectangle(
            Point::new(0.0, window.y),
            Size::new(window.x, window.height),
            shade,
        );
        frame.fill_rectangle(
            Point::new(window.x + window.width, window.y),
            Size::new(size.width - window.x - window.width, window.height),
            shade,
        );

        let outline = if self.decoded {
            Color::from_rgb(0.2, 0.8, 0.3)
        } else {
            Color::WHITE
        };
        frame.stroke(
            &Path::rectangle(window.position(), window.size()),
            Stroke::default().with_color(outline).with_width(2.0),
        );

        vec![frame.into_geometry()]
    }
}
