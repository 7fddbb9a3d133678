//! # Presenter Contract
//!
//! Maps published resolution state to what should be shown. The mapping is pure;
//! a [`Presenter`] turns the resulting [`Presentation`] into whatever its UI
//! layer needs and never takes part in resolution decisions.

use serde::{Deserialize, Serialize};

use crate::cache::LocalPath;
use crate::identity::ResourceIdentity;
use crate::state::ResolutionState;

/// Player dimensions, left to the presenter when unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorSize {
    #[default]
    Small,
    Large,
}

/// Loading indicator appearance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub size: IndicatorSize,
    pub color: Option<String>,
}

/// Static display options handed to the presenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Media shown under the indicator while loading
    pub placeholder: Option<String>,
    /// Poster image for the player
    pub thumbnail: Option<String>,
    pub indicator: IndicatorConfig,
    pub layout: Layout,
    pub disable_controls_auto_hide: bool,
    pub end_with_thumbnail: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            placeholder: None,
            thumbnail: None,
            indicator: IndicatorConfig::default(),
            layout: Layout::default(),
            disable_controls_auto_hide: true,
            end_with_thumbnail: true,
        }
    }
}

/// What the player should open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerSource {
    /// Local cached copy
    Cached(LocalPath),
    /// Original remote resource. `degraded` is set when caching was attempted
    /// and failed.
    Remote { url: String, degraded: bool },
    /// Placeholder media from the display config
    Placeholder(String),
    /// The identity has no URL
    Unavailable,
}

impl PlayerSource {
    pub fn uri(&self) -> Option<String> {
        match self {
            PlayerSource::Cached(path) => Some(path.to_file_uri()),
            PlayerSource::Remote { url, .. } => Some(url.clone()),
            PlayerSource::Placeholder(uri) => Some(uri.clone()),
            PlayerSource::Unavailable => None,
        }
    }
}

/// Inputs for a player view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProps {
    /// Remount key; changes whenever the source changes
    pub key: String,
    pub source: PlayerSource,
    pub thumbnail: Option<String>,
    pub layout: Layout,
    pub disable_controls_auto_hide: bool,
    pub end_with_thumbnail: bool,
}

impl PlayerProps {
    fn new(source: PlayerSource, display: &DisplayConfig) -> Self {
        Self {
            key: source.uri().unwrap_or_default(),
            source,
            thumbnail: display.thumbnail.clone(),
            layout: display.layout,
            disable_controls_auto_hide: display.disable_controls_auto_hide,
            end_with_thumbnail: display.end_with_thumbnail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// Waiting for the cache. `placeholder` is a player for the placeholder
    /// media, drawn under the indicator.
    Loading {
        placeholder: Option<PlayerProps>,
        indicator: IndicatorConfig,
    },
    Player(PlayerProps),
}

/// Renders a [`Presentation`]
pub trait Presenter {
    type Output;

    fn render(&self, presentation: &Presentation) -> Self::Output;
}

/// Decide what to show for the given state
pub fn present(
    state: &ResolutionState,
    identity: Option<&ResourceIdentity>,
    display: &DisplayConfig,
) -> Presentation {
    if state.is_loading() {
        return Presentation::Loading {
            placeholder: display
                .placeholder
                .clone()
                .map(|uri| PlayerProps::new(PlayerSource::Placeholder(uri), display)),
            indicator: display.indicator.clone(),
        };
    }

    let source = match (&state.resolved_local_path, identity.and_then(|i| i.url())) {
        (Some(path), _) if state.cacheable => PlayerSource::Cached(path.clone()),
        (_, Some(url)) => PlayerSource::Remote {
            url: url.to_string(),
            degraded: state.degraded,
        },
        _ => PlayerSource::Unavailable,
    };
    Presentation::Player(PlayerProps::new(source, display))
}
