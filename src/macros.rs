#[macro_export]
macro_rules! type_info {
    ($base:ident, $props:expr) => {{
        let mut props = alloc::vec::Vec::new();
        for c in $props.chars() {
            match c {
                'z' => props.push($crate::type_checker::Property::Z),
                'o' => props.push($crate::type_checker::Property::O),
                'n' => props.push($crate::type_checker::Property::N),
                'd' => props.push($crate::type_checker::Property::D),
                'u' => props.push($crate::type_checker::Property::U),
                _ => continue,
            }
        }
        $crate::type_checker::TypeInfo::new($crate::type_checker::MiniscriptType::$base, props)
    }};
}
