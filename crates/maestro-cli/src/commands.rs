pub mod codelab;
pub mod configure;
pub mod run;
pub mod session;
pub mod version;
