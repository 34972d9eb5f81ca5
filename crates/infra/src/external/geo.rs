use tripstay_core::GeoPoint;

/// Distance oracle used by search and suggestions only.
pub trait GeoLookup: Send + Sync {
    /// Distance in meters.
    fn distance_between(&self, a: GeoPoint, b: GeoPoint) -> f64;
}

impl<G> GeoLookup for std::sync::Arc<G>
where
    G: GeoLookup + ?Sized,
{
    fn distance_between(&self, a: GeoPoint, b: GeoPoint) -> f64 {
        (**self).distance_between(a, b)
    }
}

/// Great-circle distance on a spherical earth.
#[derive(Debug, Default, Clone, Copy)]
pub struct HaversineGeoLookup;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

impl GeoLookup for HaversineGeoLookup {
    fn distance_between(&self, a: GeoPoint, b: GeoPoint) -> f64 {
        let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
        let d_lat = (b.lat - a.lat).to_radians();
        let d_lon = (b.lon - a.lon).to_radians();

        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
    }
}
