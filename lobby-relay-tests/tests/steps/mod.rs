mod connection_steps;
mod readiness_steps;
mod status_steps;
