pub mod auth_service;
pub mod catalog;
pub mod conversation;
pub mod friendship;
pub mod likes;
pub mod media;
pub mod menu;
pub mod profile_service;
pub mod rating;
pub mod review_rules;
pub mod token_service;
