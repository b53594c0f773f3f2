//! Вспомогательные функции для тестов

/// Допуск при сравнении чисел с плавающей точкой
pub const TEST_TOLERANCE: f32 = 1e-4;

/// Проверка, что два числа совпадают с точностью до `TEST_TOLERANCE`
pub fn value_close(target: f32, value: f32) -> bool {
    (target - value).abs() < TEST_TOLERANCE
}

/// Проверка с произвольным допуском
pub fn value_within(target: f32, value: f32, tolerance: f32) -> bool {
    (target - value).abs() <= tolerance
}
