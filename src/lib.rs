pub mod animation;
pub mod axis;
pub mod config;
pub mod convert;
pub mod dump;
pub mod error;
pub mod packfile;
pub mod scene;
pub mod skeleton;
pub mod tools;
