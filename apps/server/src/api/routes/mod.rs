mod registry;

pub use registry::registry_routes;
