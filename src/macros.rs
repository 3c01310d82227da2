/// `(sin, cos)` of an angle given in degrees.
#[macro_export]
macro_rules! sin_cos_deg {
    ($x: expr) => {
        $x.to_radians().sin_cos()
    };
}
