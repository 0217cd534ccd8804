mod helpers;
mod session;
mod view_model;
mod websocket;
