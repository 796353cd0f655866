mod helpers;
mod misc;
mod status;
