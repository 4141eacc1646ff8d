use super::*;

#[test]
fn offset_z_only_touches_depth() {
    let v = Vec3::new(0.1, -0.2, 0.0).offset_z(0.002);
    assert_eq!(v, Vec3::new(0.1, -0.2, 0.002));
}

#[test]
fn attribute_uses_three_decimals() {
    assert_eq!(Vec3::new(1.0, 0.25, -0.0006).to_attribute(), "1.000 0.250 -0.001");
}

#[test]
fn serde_uses_array_form() {
    let v: Vec3 = serde_json::from_str("[1, 2.5, 3]").unwrap();
    assert_eq!(v, Vec3::new(1.0, 2.5, 3.0));
    assert_eq!(serde_json::to_string(&v).unwrap(), "[1.0,2.5,3.0]");
}
