pub mod chrome;
pub mod connection;

pub use self::chrome::Chrome;
pub use self::connection::CdpConnection;

/// Clip region in CSS pixels (used by `Page.captureScreenshot`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl ClipRect {
    /// Whole-document clip anchored at the origin, at least 1x1.
    pub fn full_page(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: width.ceil().max(1.0),
            h: height.ceil().max(1.0),
        }
    }
}
