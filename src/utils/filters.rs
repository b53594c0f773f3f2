//! Цифровые фильтры для обработки сигналов

/// Кольцевой буфер фиксированного размера со скользящей суммой
///
/// Используется для окон давления, температуры, вертикального ускорения и
/// ошибок GPS. `index` указывает на ячейку для следующей записи, `count`
/// растет до `N` и дальше не меняется. Сумма поддерживается за O(1).
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    values: [f32; N],
    index: usize,
    count: usize,
    sum: f32,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            values: [0.0; N],
            index: 0,
            count: 0,
            sum: 0.0,
        }
    }

    /// Добавление значения, возвращает вытесненное (0.0 пока буфер не полон)
    pub fn push(&mut self, value: f32) -> f32 {
        if N == 0 {
            return 0.0;
        }
        let evicted = if self.count == N {
            self.values[self.index]
        } else {
            self.count += 1;
            0.0
        };
        self.sum += value - evicted;
        self.values[self.index] = value;
        self.index = (self.index + 1) % N;
        // Пересчет суммы на каждом обороте окна, ошибка округления не копится
        if self.index == 0 {
            self.sum = self.values[..self.count].iter().sum();
        }
        evicted
    }

    /// Сумма значений в окне
    pub fn sum(&self) -> f32 {
        self.sum
    }

    /// Среднее по заполненной части окна
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f32
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

}

/// Кольцевой буфер целых отсчетов АЦП с точной суммой
///
/// Сырые отсчеты барометра достигают 2^24, сумма окна в f32 теряет младшие
/// разряды, поэтому сумма ведется в `i64`.
#[derive(Debug, Clone)]
pub struct IntRingBuffer<const N: usize> {
    values: [i32; N],
    index: usize,
    count: usize,
    sum: i64,
}

impl<const N: usize> Default for IntRingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> IntRingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            values: [0; N],
            index: 0,
            count: 0,
            sum: 0,
        }
    }

    pub fn push(&mut self, value: i32) {
        if N == 0 {
            return;
        }
        if self.count == N {
            self.sum -= self.values[self.index] as i64;
        } else {
            self.count += 1;
        }
        self.sum += value as i64;
        self.values[self.index] = value;
        self.index = (self.index + 1) % N;
    }

    pub fn sum(&self) -> i64 {
        self.sum
    }

    /// Среднее с округлением до ближайшего целого
    pub fn average(&self) -> i32 {
        if self.count == 0 {
            return 0;
        }
        let count = self.count as i64;
        let half = if self.sum >= 0 { count / 2 } else { -(count / 2) };
        ((self.sum + half) / count) as i32
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Экспоненциальный фильтр нижних частот с фиксированным весом
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    /// Вес нового значения (0.0-1.0)
    alpha: f32,
    /// Текущее выходное значение
    output: f32,
    /// Флаг инициализации
    initialized: bool,
}

impl LowPassFilter {
    /// Создание нового фильтра
    ///
    /// # Параметры
    /// * `alpha` - вес нового значения за такт
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            output: 0.0,
            initialized: false,
        }
    }

    /// Фильтрация одного значения
    pub fn filter(&mut self, input: f32) -> f32 {
        if !self.initialized {
            // При первом вызове просто запоминаем значение
            self.output = input;
            self.initialized = true;
        } else {
            // y[n] = α * x[n] + (1 - α) * y[n-1]
            self.output = self.alpha * input + (1.0 - self.alpha) * self.output;
        }

        self.output
    }

    /// Получение текущего выходного значения без обновления
    pub fn output(&self) -> f32 {
        self.output
    }

    /// Установка нового значения без фильтрации
    pub fn set_output(&mut self, value: f32) {
        self.output = value;
        self.initialized = true;
    }
}
