//! Data models for the tour pipeline

mod tour_session;

pub use tour_session::{
    GroundingSource, HistoryResult, LandmarkInfo, StateTransition, TourSession,
};
