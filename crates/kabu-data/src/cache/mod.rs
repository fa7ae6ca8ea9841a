//! 캐싱 레이어.
//!
//! - 파생 뷰 캐시: 업종별 그룹 뷰를 파일로 보관 (수정 시각 기준 TTL)

pub mod sector_view;

pub use sector_view::{
    build_sector_view, is_fresh, load_classification, Classification, DerivedViewCache,
    SectorView, ViewRow, DEFAULT_VIEW_TTL,
};
