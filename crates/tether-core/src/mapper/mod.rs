//! Mapper - DB の行を転送用の ResultRow に変換する

pub mod row_mapper;

pub use self::row_mapper::{RowMapper, ScanFailure, ScanRow};
