pub mod engagement;
pub mod moderation;
pub mod post;
pub mod role;
pub mod social_graph;
pub mod user;
